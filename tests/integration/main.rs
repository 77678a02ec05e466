mod key_exchange;
