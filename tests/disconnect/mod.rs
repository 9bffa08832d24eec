mod write_notify_loss;
