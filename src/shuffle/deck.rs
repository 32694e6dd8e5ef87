//! Role-card deck: the plaintext domain of the shuffle.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// An opaque card slot value, plaintext or layered-encrypted.
pub type CardValue = BigUint;

/// One card per player; the slot count never changes for a room's lifetime.
pub type Deck = Vec<CardValue>;

/// Card values start here so the deck stays clear of 0 and 1, the fixed
/// points of modular exponentiation (0^e = 0, 1^e = 1 would leak the slot).
const ROLE_CARD_BASE: u64 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Mafia,
    Doctor,
    Detective,
    Civilian,
    /// Placeholder for "not yet decrypted by this observer"; never dealt.
    Unknown,
}

impl Role {
    pub fn as_byte(self) -> u8 {
        match self {
            Role::Unknown => 0,
            Role::Mafia => 1,
            Role::Doctor => 2,
            Role::Detective => 3,
            Role::Civilian => 4,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Role> {
        match byte {
            0 => Some(Role::Unknown),
            1 => Some(Role::Mafia),
            2 => Some(Role::Doctor),
            3 => Some(Role::Detective),
            4 => Some(Role::Civilian),
            _ => None,
        }
    }

    /// Encode into the cipher domain. Unknown is an observer-side
    /// placeholder and has no card encoding.
    pub fn card_value(self) -> Option<CardValue> {
        match self {
            Role::Unknown => None,
            role => Some(BigUint::from(ROLE_CARD_BASE + role.as_byte() as u64 - 1)),
        }
    }

    pub fn from_card_value(value: &CardValue) -> Option<Role> {
        let small: u64 = value.try_into().ok()?;
        let index = small.checked_sub(ROLE_CARD_BASE - 1)?;
        let role = Role::from_byte(u8::try_from(index).ok()?)?;
        (role != Role::Unknown).then_some(role)
    }

    pub fn is_town(self) -> bool {
        matches!(self, Role::Doctor | Role::Detective | Role::Civilian)
    }
}

/// Role multiset for an n-player room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleDistribution {
    pub mafia: usize,
    pub doctor: usize,
    pub detective: usize,
    pub civilian: usize,
}

/// mafia = max(1, n/4); one doctor from 4 players, one detective from 5;
/// everyone else is a civilian.
pub fn role_distribution(player_count: usize) -> RoleDistribution {
    assert!(player_count >= 3, "a deck needs at least 3 players");
    let mafia = std::cmp::max(1, player_count / 4);
    let doctor = usize::from(player_count >= 4);
    let detective = usize::from(player_count >= 5);
    RoleDistribution {
        mafia,
        doctor,
        detective,
        civilian: player_count - mafia - doctor - detective,
    }
}

/// The plaintext deck the first shuffler starts from, in canonical order.
/// The order is irrelevant: every player permutes it before anyone sees it.
pub fn generate_initial_deck(player_count: usize) -> Deck {
    let dist = role_distribution(player_count);
    let mut deck = Deck::with_capacity(player_count);
    for _ in 0..dist.mafia {
        deck.push(Role::Mafia.card_value().unwrap());
    }
    for _ in 0..dist.doctor {
        deck.push(Role::Doctor.card_value().unwrap());
    }
    for _ in 0..dist.detective {
        deck.push(Role::Detective.card_value().unwrap());
    }
    for _ in 0..dist.civilian {
        deck.push(Role::Civilian.card_value().unwrap());
    }
    deck
}
