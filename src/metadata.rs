/// Ordered header/trailer map: each key carries an ordered list of values.
///
/// Insertion order of keys is preserved on the wire. Setting an existing key
/// replaces its values in place. Metadata decoded from the wire keeps every
/// entry it carried, including repeated keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, Vec<String>)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all values for `key`, keeping its original position if present.
    pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((key, values)),
        }
    }

    /// Appends one value to `key`, creating the entry if needed.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.push(value.into()),
            None => self.entries.push((key, vec![value.into()])),
        }
    }

    /// Adds an entry as-is, even if `key` is already present. Decoding uses
    /// this so entries repeated on the wire survive in order.
    pub(crate) fn push_entry(&mut self, key: String, values: Vec<String>) {
        self.entries.push((key, values));
    }

    /// Values of the first entry for `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn get_first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<String>)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, Vec<String>)>>(iter: T) -> Self {
        let mut metadata = Metadata::new();
        for (key, values) in iter {
            metadata.set(key, values);
        }
        metadata
    }
}
