mod helpers;

mod grow_tests;
mod lock_tests;
