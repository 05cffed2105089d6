//! Schema registry keys.
//!
//! Keys have the form `"<package>/<TypeName>"` and must match the names
//! published by ROS exactly, including case. Service request and response
//! halves are keyed by appending `Request` / `Response` to the service type.

/// `tf2_msgs/TFMessage`
pub const TF_MESSAGE: &str = "tf2_msgs/TFMessage";

/// `geometry_msgs/TransformStamped`
pub const TRANSFORM_STAMPED: &str = "geometry_msgs/TransformStamped";

/// `rosgraph_msgs/Clock`
pub const CLOCK: &str = "rosgraph_msgs/Clock";

/// `std_msgs/String`
pub const STRING: &str = "std_msgs/String";

/// `std_msgs/Header`
pub const HEADER: &str = "std_msgs/Header";

/// `std_srvs/SetBool`
pub const SET_BOOL: &str = "std_srvs/SetBool";

/// `std_srvs/Trigger`
pub const TRIGGER: &str = "std_srvs/Trigger";

/// Registry key for the request half of a service type.
pub fn request_of(service_type: &str) -> String {
    format!("{service_type}Request")
}

/// Registry key for the response half of a service type.
pub fn response_of(service_type: &str) -> String {
    format!("{service_type}Response")
}

/// Check that a schema name has the `"<package>/<TypeName>"` shape.
pub fn is_well_formed(name: &str) -> bool {
    match name.split_once('/') {
        Some((package, type_name)) => {
            !package.is_empty() && !type_name.is_empty() && !type_name.contains('/')
        }
        None => false,
    }
}
