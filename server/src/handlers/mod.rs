// Handler modules for API endpoints
mod create_group;
mod delete_messages;
mod edit_message;
mod get_group_messages;
mod get_groups;
mod get_messages;
mod mark_seen;
mod send_group_message;
mod send_message;
mod update_group_members;

// Re-export handlers
pub use create_group::create_group;
pub use delete_messages::delete_messages;
pub use edit_message::edit_message;
pub use get_group_messages::get_group_messages;
pub use get_groups::get_groups;
pub use get_messages::get_messages;
pub use mark_seen::mark_seen;
pub use send_group_message::send_group_message;
pub use send_message::send_message;
pub use update_group_members::update_group_members;
