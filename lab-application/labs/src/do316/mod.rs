//! DO316: Managing Virtual Machines with OpenShift Virtualization

pub mod review_cr1;
pub mod review_cr2;
pub mod review_cr3;

/// Every DO316 lab drives the cluster from the utility machine
pub const TARGETS: &[&str] = &["utility"];
