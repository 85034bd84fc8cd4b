use eyre::ContextCompat;
use rand::seq::{IndexedRandom, SliceRandom};

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!#$%&()*+,-.:;<=>?[]^_{|}~";

/// Complexity rules for generated database passwords
#[derive(Clone, Debug)]
pub struct PasswordPolicy {
    pub min_length: usize,

    /// Characters that break connection strings and quoting
    pub exclude: &'static str,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        PasswordPolicy {
            min_length: 16,
            exclude: "\"@/\\'",
        }
    }
}

impl PasswordPolicy {
    /// Check a password against the policy
    pub fn check(&self, password: &str) -> bool {
        password.len() >= self.min_length
            && password.chars().all(|c| !self.exclude.contains(c))
            && [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS]
                .iter()
                .all(|class| password.chars().any(|c| class.contains(c)))
    }

    /// Generate a password satisfying the policy with fresh OS randomness
    ///
    /// Never called during synthesis. Credentials are resolved up front and
    /// passed in, so composing the same input twice yields the same plan and
    /// a redeploy never rotates anything by accident.
    pub fn generate(&self) -> eyre::Result<String> {
        let mut rng = rand::rng();
        let mut password: Vec<char> = Vec::with_capacity(self.min_length);

        let pools: Vec<Vec<char>> = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS]
            .iter()
            .map(|class| class.chars().filter(|c| !self.exclude.contains(*c)).collect())
            .collect();

        // One of each required class first, then fill up from all classes
        for pool in &pools {
            password.push(*pool.choose(&mut rng).wrap_err("Empty character class")?);
        }

        let all: Vec<char> = pools.concat();

        while password.len() < self.min_length {
            password.push(*all.choose(&mut rng).wrap_err("Empty character pool")?);
        }

        password.shuffle(&mut rng);
        Ok(password.into_iter().collect())
    }
}

/// Admin login for a database-like resource group
#[derive(Clone, Debug)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl AdminCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        AdminCredentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Fresh credentials satisfying the password policy
    pub fn generate(username: &str, policy: &PasswordPolicy) -> eyre::Result<Self> {
        Ok(AdminCredentials {
            username: username.to_string(),
            password: policy.generate()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_passwords_satisfy_the_policy() {
        let policy = PasswordPolicy::default();

        for _ in 0..1000 {
            let password = policy.generate().expect("should generate");

            assert!(password.len() >= policy.min_length);
            assert!(password.chars().all(|c| !policy.exclude.contains(c)));

            for class in [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS] {
                assert!(
                    password.chars().any(|c| class.contains(c)),
                    "missing a character from {class:?} in {password:?}"
                );
            }

            assert!(policy.check(&password));
        }
    }

    #[test]
    fn generation_draws_fresh_randomness() {
        let policy = PasswordPolicy::default();
        let first = policy.generate().expect("should generate");
        let second = policy.generate().expect("should generate");
        assert_ne!(first, second);
    }

    #[test]
    fn check_rejects_short_and_unsafe_passwords() {
        let policy = PasswordPolicy::default();
        assert!(!policy.check("Short1!"));
        assert!(!policy.check("NoSymbolsHere1234"));
        assert!(!policy.check("Unsafe@Password1!aaa"));
    }

    #[test]
    fn longer_minimum_is_respected() {
        let policy = PasswordPolicy {
            min_length: 32,
            ..PasswordPolicy::default()
        };
        let password = policy.generate().expect("should generate");
        assert_eq!(password.len(), 32);
    }
}
