use serde::{de, ser};

/// 2.8.1 Role
/// Link endpoint role.
/// <type name="role" class="restricted" source="boolean">
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// <choice name="sender" value="false"/>
    Sender,
    /// <choice name="receiver" value="true"/>
    Receiver,
}

impl Default for Role {
    fn default() -> Self {
        Role::Sender
    }
}

impl From<Role> for bool {
    fn from(role: Role) -> Self {
        match role {
            Role::Sender => false,
            Role::Receiver => true,
        }
    }
}

impl From<&Role> for bool {
    fn from(role: &Role) -> Self {
        match role {
            Role::Sender => false,
            Role::Receiver => true,
        }
    }
}

impl From<bool> for Role {
    fn from(value: bool) -> Self {
        match value {
            false => Role::Sender,
            true => Role::Receiver,
        }
    }
}

impl ser::Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        bool::from(self).serialize(serializer)
    }
}

struct Visitor {}

impl<'de> de::Visitor<'de> for Visitor {
    type Value = Role;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("enum Role")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Role::from(v))
    }
}

impl<'de> de::Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_bool(Visitor {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqp_codec::{from_slice, to_vec};

    #[test]
    fn role_round_trips() {
        for role in [Role::Sender, Role::Receiver] {
            let buf = to_vec(&role).unwrap();
            let decoded: Role = from_slice(&buf).unwrap();
            assert_eq!(decoded, role);
        }
    }
}
