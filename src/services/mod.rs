pub mod vault_service;
