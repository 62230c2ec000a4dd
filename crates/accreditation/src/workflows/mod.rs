pub mod accreditation;
pub mod catalog;
