pub mod ai_model_credential;
pub mod analytics_dedup;
pub mod analytics_event;
pub mod business;
pub mod business_analytics;
pub mod offer;
pub mod offer_analytics;
pub mod user;

pub use ai_model_credential::Entity as AiModelCredentialEntity;
pub use analytics_dedup::Entity as AnalyticsDedupEntity;
pub use analytics_event::Entity as AnalyticsEventEntity;
pub use business::Entity as BusinessEntity;
pub use business_analytics::Entity as BusinessAnalyticsEntity;
pub use offer::Entity as OfferEntity;
pub use offer_analytics::Entity as OfferAnalyticsEntity;
pub use user::Entity as UserEntity;
