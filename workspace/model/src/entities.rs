//! Root of all SeaORM entity modules.
//! One module per table of the campus schema: identity, schools and their
//! memberships, courses, enrollments, classes, attendance and payments.

pub mod attendance;
pub mod class;
pub mod course;
pub mod course_teacher;
pub mod enrollment;
pub mod payment;
pub mod school;
pub mod school_member;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::attendance::Entity as Attendance;
    pub use super::class::Entity as Class;
    pub use super::course::Entity as Course;
    pub use super::course_teacher::Entity as CourseTeacher;
    pub use super::enrollment::Entity as Enrollment;
    pub use super::payment::Entity as Payment;
    pub use super::school::Entity as School;
    pub use super::school_member::Entity as SchoolMember;
    pub use super::user::Entity as User;
}
