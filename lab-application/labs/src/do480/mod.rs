//! DO480: Multicluster Management with Red Hat OpenShift Platform Plus

pub mod applications_review;

pub const TARGETS: &[&str] = &["localhost", "workstation"];
