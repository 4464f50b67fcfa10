pub mod cart_items;
pub mod carts;
pub mod coupons;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod product_variants;
pub mod products;

pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use coupons::Entity as Coupons;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
