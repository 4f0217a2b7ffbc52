pub mod budget;
pub mod cart;
pub mod company;
pub mod notification;
pub mod product;
pub mod purchase;
pub mod user;

pub use budget::{Budget, BudgetCriteria};
pub use cart::{CartItem, WishlistItem};
pub use company::Company;
pub use notification::{Notification, NotificationTarget};
pub use product::{Category, Product};
pub use purchase::{PurchaseItem, PurchaseRequest, PurchaseStatus};
pub use user::{Role, User};
