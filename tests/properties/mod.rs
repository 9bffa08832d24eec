mod beacons;
mod recycling;
mod sync_groups;
