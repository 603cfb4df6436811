//! `sqlward encrypt-password` - produce an `AES:` value for `--password=`.

use sqlward_session::encrypt_password;

pub fn run(plain: &str, key: &str) {
    println!("{}", encrypt_password(plain, key));
}
