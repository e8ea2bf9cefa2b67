pub mod tx_status;
