mod monitor_case1;
mod monitor_case2_many_subscribers;
