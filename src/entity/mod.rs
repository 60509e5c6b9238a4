pub mod offer_rules;
pub mod offer_targets;
pub mod offers;
pub mod order_item_bonuses;
pub mod order_items;
pub mod order_status_logs;
pub mod orders;
pub mod products;

pub use offer_rules::Entity as OfferRules;
pub use offer_targets::Entity as OfferTargets;
pub use offers::Entity as Offers;
pub use order_item_bonuses::Entity as OrderItemBonuses;
pub use order_items::Entity as OrderItems;
pub use order_status_logs::Entity as OrderStatusLogs;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
