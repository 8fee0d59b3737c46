//! Entity records pulled from the catalog API.
//!
//! Each entity kind decodes independently from one page response. Records
//! reference each other only by numeric ID; resolving those references is a
//! downstream concern, not part of the extraction engine.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A record kind the extraction engine knows how to fetch.
///
/// Implementors supply the collection name used for endpoints and output
/// artifacts, and the field-selection query sent with every page request.
/// The fetch machinery is generic over this trait, so adding a kind means
/// adding a struct and two constants.
pub trait Entity: DeserializeOwned + Serialize + Send + 'static {
    /// Collection name: endpoint path segment and output artifact stem.
    const KIND: &'static str;

    /// Field-selection query template. Pagination directives are appended
    /// per request; the template itself never changes.
    const QUERY: &'static str;
}

/// A game title.
///
/// `franchises` and `genres` hold plain numeric IDs into the corresponding
/// collections. The API omits fields that have no value, so everything past
/// `id` decodes leniently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub first_release_date: Option<i64>,
    #[serde(default)]
    pub franchises: Vec<u64>,
    #[serde(default)]
    pub genres: Vec<u64>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl Entity for Game {
    const KIND: &'static str = "games";
    // Requests a few fields (dlcs, multiplayer_modes, ports) the record does
    // not retain yet; decoding ignores them.
    const QUERY: &'static str = "fields id, name, first_release_date, dlcs, franchises, genres, multiplayer_modes, ports, summary;";
}

/// A genre label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

impl Entity for Genre {
    const KIND: &'static str = "genres";
    const QUERY: &'static str = "fields id, name;";
}

/// A franchise grouping, holding the IDs of its member games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Franchise {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub games: Vec<u64>,
}

impl Entity for Franchise {
    const KIND: &'static str = "franchises";
    const QUERY: &'static str = "fields id, name, games;";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_game_decodes_with_all_fields() {
        let json = r#"{
            "id": 1942,
            "name": "The Witness",
            "first_release_date": 1453766400,
            "franchises": [12],
            "genres": [9, 32],
            "summary": "A puzzle island."
        }"#;
        let game: Game = serde_json::from_str(json).unwrap();
        assert_eq!(game.id, 1942);
        assert_eq!(game.name, "The Witness");
        assert_eq!(game.first_release_date, Some(1_453_766_400));
        assert_eq!(game.genres, vec![9, 32]);
        assert_eq!(game.summary.as_deref(), Some("A puzzle island."));
    }

    #[test]
    fn test_game_decodes_with_omitted_fields() {
        // The API drops fields with no value; only id is guaranteed.
        let game: Game = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(game.id, 7);
        assert!(game.name.is_empty());
        assert!(game.first_release_date.is_none());
        assert!(game.franchises.is_empty());
        assert!(game.genres.is_empty());
        assert!(game.summary.is_none());
    }

    #[test]
    fn test_genre_round_trips() {
        let genre = Genre {
            id: 9,
            name: "Puzzle".to_string(),
        };
        let json = serde_json::to_string(&genre).unwrap();
        let back: Genre = serde_json::from_str(&json).unwrap();
        assert_eq!(back, genre);
    }

    #[test]
    fn test_franchise_decodes_game_ids() {
        let json = r#"{"id": 12, "name": "Zelda", "games": [1, 2, 3]}"#;
        let franchise: Franchise = serde_json::from_str(json).unwrap();
        assert_eq!(franchise.games, vec![1, 2, 3]);
    }

    #[test]
    fn test_game_query_requests_full_field_set() {
        assert_eq!(
            Game::QUERY,
            "fields id, name, first_release_date, dlcs, franchises, genres, \
             multiplayer_modes, ports, summary;"
        );
    }

    #[test]
    fn test_game_decode_ignores_unretained_fields() {
        // The query asks for more fields than the record keeps.
        let json = r#"{"id": 3, "name": "Portal", "dlcs": [9], "ports": [4]}"#;
        let game: Game = serde_json::from_str(json).unwrap();
        assert_eq!(game.id, 3);
        assert_eq!(game.name, "Portal");
    }

    #[test]
    fn test_kind_constants_are_distinct() {
        assert_eq!(Game::KIND, "games");
        assert_eq!(Genre::KIND, "genres");
        assert_eq!(Franchise::KIND, "franchises");
    }
}
