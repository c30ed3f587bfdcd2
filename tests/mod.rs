mod fcm_client_tests;
mod support;
