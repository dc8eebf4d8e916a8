pub mod appointment;
pub mod chat_message;
pub mod conversation;
pub mod customer;
pub mod invoice;
pub mod part;
pub mod payment;
pub mod user;
pub mod vehicle;
pub mod work_order;
pub mod work_order_item;
