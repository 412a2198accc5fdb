pub mod brands;
pub mod cart_items;
pub mod categories;
pub mod order_details;
pub mod orders;
pub mod products;
pub mod promotions;
pub mod users;

pub use brands::Entity as Brands;
pub use cart_items::Entity as CartItems;
pub use categories::Entity as Categories;
pub use order_details::Entity as OrderDetails;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use promotions::Entity as Promotions;
pub use users::Entity as Users;
