//! Example of using the low-level API for nested container access.
//!
//! cargo run --package lite3 --example nested_access

use lite3::{arr, from_json, map};

fn main() -> Result<(), lite3::Status> {
    let msg = from_json(r#"{"users": [{"name": "Amy"}, {"name": "Bob"}]}"#)?;
    let live = msg.as_bytes();

    // node = root["users"]
    let users = map::get_array(live, 0, "users")?;

    // node = root["users"][1]
    let user = arr::get_object(live, users, 1)?;

    // root["users"][1]["name"]
    let name = map::get_string(live, user, "name")?;

    println!("{}", name.resolve(live)?);
    Ok(())
}
