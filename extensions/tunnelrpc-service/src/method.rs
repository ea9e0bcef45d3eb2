use crate::ExtraCallOptions;
use std::{fmt, marker::PhantomData};
use tunnelrpc::CallOptions;

/// The four call shapes a method can have.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MethodKind {
    Unary,
    ServerStreaming,
    ClientStreaming,
    BidiStreaming,
}

impl MethodKind {
    pub const fn from_flags(client_streaming: bool, server_streaming: bool) -> Self {
        match (client_streaming, server_streaming) {
            (false, false) => MethodKind::Unary,
            (false, true) => MethodKind::ServerStreaming,
            (true, false) => MethodKind::ClientStreaming,
            (true, true) => MethodKind::BidiStreaming,
        }
    }
}

/// Untyped description of one method, as listed in a [`Service`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub path: &'static str,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

impl MethodDescriptor {
    pub const fn kind(&self) -> MethodKind {
        MethodKind::from_flags(self.client_streaming, self.server_streaming)
    }
}

/// A method bound to its request type `I` and response type `O`.
///
/// Generated stubs declare one of these per method as a `const` and hand it
/// to the call helpers in this crate.
pub struct ServiceMethod<I, O> {
    pub name: &'static str,
    pub path: &'static str,
    pub client_streaming: bool,
    pub server_streaming: bool,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> ServiceMethod<I, O> {
    pub const fn new(
        name: &'static str,
        path: &'static str,
        client_streaming: bool,
        server_streaming: bool,
    ) -> Self {
        Self {
            name,
            path,
            client_streaming,
            server_streaming,
            _types: PhantomData,
        }
    }

    pub const fn kind(&self) -> MethodKind {
        MethodKind::from_flags(self.client_streaming, self.server_streaming)
    }

    pub const fn descriptor(&self) -> MethodDescriptor {
        MethodDescriptor {
            name: self.name,
            path: self.path,
            client_streaming: self.client_streaming,
            server_streaming: self.server_streaming,
        }
    }

    /// Call options for this method with the caller's extras applied.
    pub fn call_options(&self, extra: ExtraCallOptions) -> CallOptions {
        CallOptions {
            method: self.path.to_string(),
            metadata: extra.metadata,
            initial_window_size: extra.initial_window_size,
        }
    }
}

// Manual impls: the type parameters are markers and need no bounds
impl<I, O> Clone for ServiceMethod<I, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, O> Copy for ServiceMethod<I, O> {}

impl<I, O> fmt::Debug for ServiceMethod<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMethod")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("client_streaming", &self.client_streaming)
            .field("server_streaming", &self.server_streaming)
            .finish()
    }
}

/// A named group of methods.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Service {
    /// Fully qualified name, e.g. `routeguide.RouteGuide`.
    pub name: &'static str,
    pub methods: &'static [MethodDescriptor],
}

impl Service {
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|method| method.name == name)
    }
}
