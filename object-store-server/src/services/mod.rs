pub mod object_service;
