pub mod nebulas;
