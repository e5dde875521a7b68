pub mod attendance;
pub mod employee;
pub mod manual_attendance;
