mod pending_subscriber;
mod subscriber_email;
// allow external `use` statements to skip `subscriber_email` etc
pub use pending_subscriber::PendingSubscriber;
pub use subscriber_email::SubscriberEmail;
