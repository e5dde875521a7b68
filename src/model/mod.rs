pub mod attendance;
pub mod employee;
pub mod manual_request;
pub mod role;
pub mod subject;
