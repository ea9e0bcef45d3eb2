use crate::route_guide::{Feature, Point, Rectangle, RouteNote, RouteSummary};
use tunnelrpc_service::{Service, ServiceMethod, method_path};

pub const GET_FEATURE: ServiceMethod<Point, Feature> = ServiceMethod::new(
    "GetFeature",
    method_path!("routeguide", "RouteGuide", "GetFeature"),
    false,
    false,
);

pub const LIST_FEATURES: ServiceMethod<Rectangle, Feature> = ServiceMethod::new(
    "ListFeatures",
    method_path!("routeguide", "RouteGuide", "ListFeatures"),
    false,
    true,
);

pub const RECORD_ROUTE: ServiceMethod<Point, RouteSummary> = ServiceMethod::new(
    "RecordRoute",
    method_path!("routeguide", "RouteGuide", "RecordRoute"),
    true,
    false,
);

pub const ROUTE_CHAT: ServiceMethod<RouteNote, RouteNote> = ServiceMethod::new(
    "RouteChat",
    method_path!("routeguide", "RouteGuide", "RouteChat"),
    true,
    true,
);

pub const SERVICE: Service = Service {
    name: "routeguide.RouteGuide",
    methods: &[
        GET_FEATURE.descriptor(),
        LIST_FEATURES.descriptor(),
        RECORD_ROUTE.descriptor(),
        ROUTE_CHAT.descriptor(),
    ],
};
