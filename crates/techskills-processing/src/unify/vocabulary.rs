//! Canonical vocabularies for categorical fields.

use crate::types::{Country, ExperienceLevel};
use crate::utils::{normalize_token, title_case};

/// Resolve a country name or alias, ignoring case, accents and punctuation.
pub fn parse_country(value: &str) -> Option<Country> {
    let token: String = normalize_token(value)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();
    let country = match token.trim() {
        "usa" | "us" | "u s a" | "united states" | "united states of america"
        | "estados unidos" | "eeuu" | "ee uu" => Country::Usa,
        "spain" | "espana" => Country::Spain,
        "colombia" => Country::Colombia,
        "argentina" => Country::Argentina,
        "chile" => Country::Chile,
        "peru" => Country::Peru,
        "mexico" => Country::Mexico,
        _ => return None,
    };
    Some(country)
}

/// Resolve a seniority label.
pub fn parse_experience(value: &str) -> Option<ExperienceLevel> {
    let token = normalize_token(value).replace(['-', '_'], " ");
    let level = match token.trim() {
        "junior" | "jr" | "trainee" | "entry" | "entry level" | "intern" | "junior level" => {
            ExperienceLevel::Junior
        }
        "mid" | "middle" | "mid level" | "semi senior" | "semisenior" | "ssr"
        | "intermediate" => ExperienceLevel::Mid,
        "senior" | "sr" | "senior level" => ExperienceLevel::Senior,
        "lead" | "tech lead" | "principal" | "staff" | "expert" | "architect" => {
            ExperienceLevel::Expert
        }
        _ => return None,
    };
    Some(level)
}

/// Known spellings of technologies and frameworks, keyed by normalized token.
const TECHNOLOGY_VOCABULARY: &[(&str, &str)] = &[
    ("javascript", "JavaScript"),
    ("js", "JavaScript"),
    ("typescript", "TypeScript"),
    ("ts", "TypeScript"),
    ("python", "Python"),
    ("java", "Java"),
    ("c#", "C#"),
    ("csharp", "C#"),
    ("c++", "C++"),
    ("cpp", "C++"),
    ("go", "Go"),
    ("golang", "Go"),
    ("rust", "Rust"),
    ("php", "PHP"),
    ("ruby", "Ruby"),
    ("kotlin", "Kotlin"),
    ("swift", "Swift"),
    ("scala", "Scala"),
    ("r", "R"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("node.js", "Node.js"),
    ("nodejs", "Node.js"),
    ("node", "Node.js"),
    ("react", "React"),
    ("reactjs", "React"),
    ("react.js", "React"),
    ("angular", "Angular"),
    ("vue", "Vue.js"),
    ("vue.js", "Vue.js"),
    ("vuejs", "Vue.js"),
    ("django", "Django"),
    ("flask", "Flask"),
    ("fastapi", "FastAPI"),
    ("spring", "Spring"),
    ("spring boot", "Spring Boot"),
    (".net", ".NET"),
    ("dotnet", ".NET"),
    ("asp.net", "ASP.NET"),
    ("laravel", "Laravel"),
    ("rails", "Ruby on Rails"),
    ("ruby on rails", "Ruby on Rails"),
    ("express", "Express"),
    ("express.js", "Express"),
    ("tensorflow", "TensorFlow"),
    ("pytorch", "PyTorch"),
    ("ai", "AI"),
    ("ia", "AI"),
    ("ml", "Machine Learning"),
    ("iot", "IoT"),
    ("devops", "DevOps"),
    ("aws", "AWS"),
];

/// Canonical spelling of one technology token; unknown tokens are title-cased.
pub fn canonical_technology(value: &str) -> Option<String> {
    let token = normalize_token(value);
    if token.is_empty() {
        return None;
    }
    let known = TECHNOLOGY_VOCABULARY
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, canonical)| canonical.to_string());
    Some(known.unwrap_or_else(|| title_case(value)))
}
