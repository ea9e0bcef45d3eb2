mod client;
mod messages;
mod methods;

pub use client::RouteGuideClient;
pub use messages::{Feature, Point, Rectangle, RouteNote, RouteSummary};
pub use methods::{GET_FEATURE, LIST_FEATURES, RECORD_ROUTE, ROUTE_CHAT, SERVICE};
