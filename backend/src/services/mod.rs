//! Business logic services for the SST Training Management Platform

pub mod auth;
pub mod certificate;
pub mod coach;
pub mod collaborator;
pub mod course;
pub mod epp;
pub mod inspection;
pub mod location;
pub mod reporting;
pub mod training;
pub mod user;

pub use auth::AuthService;
pub use certificate::CertificateService;
pub use coach::CoachService;
pub use collaborator::CollaboratorService;
pub use course::CourseService;
pub use epp::EppService;
pub use inspection::InspectionService;
pub use location::LocationService;
pub use reporting::ReportingService;
pub use training::TrainingService;
pub use user::UserService;
