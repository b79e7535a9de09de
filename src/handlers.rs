pub mod attendance;
pub mod auth;
pub mod classes;
pub mod course_teachers;
pub mod courses;
pub mod enrollments;
pub mod health;
pub mod payments;
pub mod rules;
pub mod schools;
pub mod users;
