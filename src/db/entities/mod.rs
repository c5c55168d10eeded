pub mod feedback;
pub mod monitoring;

pub mod prelude {
    pub use super::feedback::Entity as Feedback;
    pub use super::monitoring::Entity as Monitoring;
}
