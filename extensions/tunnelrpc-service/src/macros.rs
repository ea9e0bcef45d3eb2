/// Builds a method path (`/{package}.{Service}/{Method}`) at compile time.
///
/// ```rust
/// use tunnelrpc_service::method_path;
/// const PATH: &str = method_path!("routeguide", "RouteGuide", "GetFeature");
/// assert_eq!(PATH, "/routeguide.RouteGuide/GetFeature");
/// ```
#[macro_export]
macro_rules! method_path {
    ($package:literal, $service:literal, $method:literal) => {
        concat!("/", $package, ".", $service, "/", $method)
    };
}
