pub mod jack;
