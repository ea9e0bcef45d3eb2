pub mod route_guide;
