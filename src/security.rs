use std::convert::TryInto;
use std::path::PathBuf;
use std::{env, fs};

const PASSWORD_SALT: &str = "password.salt";
const JWT_SECRET: &str = "jwt.secret";

pub type Salt = [u8; 16];
pub type Secret = [u8; 64];

#[derive(Debug, Clone)]
pub struct Security {
    pub salt: Salt,
    pub jwt_secret: Vec<u8>,
}

#[inline]
fn security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or("./security".to_string()))
}

fn generate_secret() -> Vec<u8> {
    let secret: Secret = [(); 64].map(|_| rand::random::<u8>());
    secret.to_vec()
}

impl Security {
    pub fn load() -> Security {
        let dir = security_dir();

        if cfg!(feature = "generate-security") {
            fs::create_dir_all(dir.clone())
                .expect("unable to create directory for storing security information");
        }

        tracing::info!("Loading password salt...");
        let mut salt: Option<Salt> = fs::read(dir.join(PASSWORD_SALT))
            .map(|s| s.try_into().ok())
            .ok()
            .flatten();

        match salt {
            None => {
                tracing::info!("Salt not found in '{}'.", dir.join(PASSWORD_SALT).display());
                if cfg!(feature = "generate-security") {
                    tracing::info!("Generating a new password salt.");
                    let generated: Salt = rand::random();
                    fs::write(dir.join(PASSWORD_SALT), generated).expect("unable to write salt");
                    salt = Some(generated);
                }
            }
            Some(_) => tracing::info!("Salt found and loaded."),
        }

        tracing::info!("Loading JWT signing secret...");
        let jwt_secret = match fs::read(dir.join(JWT_SECRET)) {
            Ok(secret) if secret.len() >= 32 => {
                tracing::info!("Loaded JWT secret.");
                secret
            }
            _ if cfg!(feature = "generate-security") => {
                tracing::info!("Unable to load JWT secret. Generating a new one.");
                let secret = generate_secret();
                fs::write(dir.join(JWT_SECRET), &secret).expect("unable to write JWT secret");
                secret
            }
            _ => panic!("Unable to load JWT secret from '{}'.", dir.display()),
        };

        Security {
            salt: salt.expect("password salt is required"),
            jwt_secret,
        }
    }
}
