use chrono::NaiveDate;
use run_club_bot::utils::validation::*;

#[cfg(test)]
mod validation_tests {
    use super::*;

    // Training title validation tests
    #[test]
    fn test_valid_training_titles() {
        let valid_titles = vec![
            "Run".to_string(),
            "Недільна довга".to_string(),
            "Інтервали 10x400".to_string(),
            "🏃 Ранкова пробіжка".to_string(),
            "Б".repeat(200), // Exactly 200 characters
        ];

        for title in valid_titles {
            assert!(validate_training_title(&title).is_ok(), "Should accept title: {}", title);
        }
    }

    #[test]
    fn test_invalid_training_titles() {
        let invalid_titles = vec![
            "".to_string(),
            "Бі".to_string(),    // Too short
            "Б".repeat(201),      // Too long
            "   ".to_string(),
            "Перший\nрядок".to_string(),
        ];

        for title in invalid_titles {
            assert!(validate_training_title(&title).is_err(), "Should reject title: {:?}", title);
        }
    }

    #[test]
    fn test_training_title_is_trimmed() {
        assert_eq!(validate_training_title("  Темпова  ").unwrap(), "Темпова");
    }

    // Location validation tests
    #[test]
    fn test_location_bounds() {
        assert!(validate_location("Гідропарк, вхід з метро").is_ok());
        assert!(validate_location("ВДНГ").is_ok());
        assert!(validate_location("Ок").is_err());
        assert!(validate_location(&"л".repeat(301)).is_err());
    }

    // Profile fields
    #[test]
    fn test_person_names() {
        let cases = vec![
            ("олександр", Some("Олександр")),
            ("  МАРІЯ  ", Some("Марія")),
            ("Іра", None),           // 3 characters is too short
            ("Anna2", None),         // Digits
            ("Максиміліанадріанна", None), // 19 characters
        ];

        for (input, expected) in cases {
            match expected {
                Some(name) => assert_eq!(validate_person_name(input).unwrap(), name, "input {:?}", input),
                None => assert!(validate_person_name(input).is_err(), "Should reject name: {:?}", input),
            }
        }
    }

    #[test]
    fn test_phone_numbers() {
        assert_eq!(normalize_phone(" 380671112233 ").unwrap(), "+380671112233");
        assert!(normalize_phone("+38067").is_err());
        assert!(normalize_phone("phone").is_err());
    }

    #[test]
    fn test_birth_dates() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        assert_eq!(
            validate_date_of_birth("09.03.2025", today).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
        );
        assert!(validate_date_of_birth("10.03.2025", today).is_err());
        assert!(validate_date_of_birth("31.02.1990", today).is_err());
        assert!(validate_date_of_birth("вчора", today).is_err());
    }

    // Distance wizard fields
    #[test]
    fn test_distance_input() {
        assert_eq!(validate_distance("5").unwrap(), 5.0);
        assert_eq!(validate_distance(" 42,19 ").unwrap(), 42.19);
        assert!(validate_distance("0.5").is_err());
        assert!(validate_distance("").is_err());
    }

    #[test]
    fn test_pace_range() {
        assert_eq!(validate_pace("6:05").unwrap(), ("6:05".to_string(), 365));
        assert_eq!(validate_pace(" 4 30 ").map(|(text, _)| text).ok(), Some("4:30".to_string()));
        assert!(validate_pace("16:00").is_err());
    }

    // Chronopost buttons
    #[test]
    fn test_button_links() {
        let valid = [
            "https://runclub.example.com",
            "http://localhost:8080/path",
            "ftps://files.example.com/archive",
            "tg://resolve?domain=run_club",
            "tel:+38 (050) 123-45-67",
            "mailto:coach@example.com",
        ];
        for url in valid {
            assert!(validate_button_url(url).is_ok(), "Should accept url: {}", url);
        }

        let invalid = ["", "runclub.example.com", "mailto:nobody", "tel:", "tg://", "data:text/html,hi"];
        for url in invalid {
            assert!(validate_button_url(url).is_err(), "Should reject url: {}", url);
        }
    }

    #[test]
    fn test_rating_values() {
        for rating in 1..=5 {
            assert_eq!(validate_rating(rating).unwrap(), rating);
        }
        assert!(validate_rating(-1).is_err());
    }
}
