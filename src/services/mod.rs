pub mod auth_service;
pub mod budget_service;
pub mod company_service;
pub mod dashboard_service;
pub mod notification_service;
pub mod purchase_service;
pub mod user_service;
