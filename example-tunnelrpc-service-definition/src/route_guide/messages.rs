use bitcode::{Decode, Encode};
use std::io;
use tunnelrpc_service::RpcMessage;

/// Latitude/longitude in degrees multiplied by 10^7.
#[derive(Encode, Decode, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct Point {
    pub latitude: i32,
    pub longitude: i32,
}

impl Point {
    /// Builds a point from plain degrees.
    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: e7(latitude),
            longitude: e7(longitude),
        }
    }
}

fn e7(degrees: f64) -> i32 {
    (degrees * 10_f64.powi(7)).round() as i32
}

#[derive(Encode, Decode, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct Rectangle {
    pub lo: Point,
    pub hi: Point,
}

impl Rectangle {
    pub fn contains(&self, point: &Point) -> bool {
        let (lat_lo, lat_hi) = ordered(self.lo.latitude, self.hi.latitude);
        let (long_lo, long_hi) = ordered(self.lo.longitude, self.hi.longitude);
        (lat_lo..=lat_hi).contains(&point.latitude)
            && (long_lo..=long_hi).contains(&point.longitude)
    }
}

fn ordered(a: i32, b: i32) -> (i32, i32) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Encode, Decode, PartialEq, Eq, Debug, Clone, Default)]
pub struct Feature {
    pub name: String,
    pub location: Point,
}

#[derive(Encode, Decode, PartialEq, Eq, Debug, Clone, Default)]
pub struct RouteNote {
    pub location: Point,
    pub message: String,
}

#[derive(Encode, Decode, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct RouteSummary {
    pub point_count: i32,
    pub feature_count: i32,
    pub distance: i32,
    pub elapsed_time: i32,
}

macro_rules! bitcode_message {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RpcMessage for $ty {
                fn encode(&self) -> Result<Vec<u8>, io::Error> {
                    Ok(bitcode::encode(self))
                }

                fn decode(bytes: &[u8]) -> Result<Self, io::Error> {
                    bitcode::decode::<$ty>(bytes)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
                }
            }
        )*
    };
}

bitcode_message!(Point, Rectangle, Feature, RouteNote, RouteSummary);
