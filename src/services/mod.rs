pub mod access_guard;
pub mod cipher_box;
pub mod credential_broker;
pub mod integrity;
pub mod orchestrator;
