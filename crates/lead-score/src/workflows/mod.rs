pub mod crm;
pub mod scoring;
pub mod webhooks;
