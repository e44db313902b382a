//! 聊天助手的提示词与兜底文案

use serde::{Deserialize, Serialize};

/// 回复语言；未知语言按英文处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fi,
    En,
}

impl Language {
    /// 请求中的语言代码；只有 `fi` 识别为芬兰语
    pub fn from_code(code: &str) -> Self {
        if code.trim().eq_ignore_ascii_case("fi") {
            Language::Fi
        } else {
            Language::En
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Fi => "fi",
            Language::En => "en",
        }
    }
}

const SYSTEM_PROMPT_FI: &str = r#"Olet Etuhinta AI-avustaja, joka auttaa käyttäjiä löytämään parhaat tarjoukset ja alennukset Suomessa.

TÄRKEÄÄ - OLE TIUKKA NÄISTÄ SÄÄNNÖISTÄ:
1. Tervehdi käyttäjää ystävällisesti suomeksi
2. Jos käyttäjä vain tervehtii (kuten "hei", "moi", "terve"), kysy mitä alennuksia tai tarjouksia he etsivät
3. ETSI TARJOUKSIA KÄYTTÄJÄN KAUPUNGISTA TAI KOKO MAAN TARJOUKSIA:
   - Näytä tarjoukset käyttäjän kaupungista
   - Näytä tarjoukset jotka on merkitty "koko maa" (valtakunnalliset)
   - Näytä tarjoukset jotka sisältävät käyttäjän kaupungin useamman kaupungin tarjouksissa
4. Jos käyttäjä kysyy tarjouksista, käytä search_offers-työkalua NÄIN:
   - Yleisille termeille kuten "vaatteet", "ruoka", "teknologia" - käytä VAIN keywords, ÄLÄ kategoriaa
   - Vain erittäin spesifeille kategorioille käytä category-kenttää
   - Käytä AINA käyttäjän kaupunkia suodattimena
5. KUN LÖYDÄT TARJOUKSIA:
   - Kirjoita lyhyt, ystävällinen viesti jossa kerrot löytäneesi tarjouksia
   - Tarjouskortit näkyvät automaattisesti viestin alapuolella
   - Kannusta käyttäjää klikkaamaan tarjouskortteja saadakseen lisätietoja
6. Jos et löydä tarjouksia käyttäjän kaupungista tai koko maan tarjouksia:
   - Sano: "En löytänyt [hakutermi] tarjouksia tänään [käyttäjän kaupunki]:ssa tai koko maan tarjouksia"
   - Ehdota vaihtoehtoisia hakutermejä samassa kaupungissa

Vastaa aina suomeksi, ole ystävällinen ja auta löytämään parhaat tarjoukset."#;

const SYSTEM_PROMPT_EN: &str = r#"You are Etuhinta's AI assistant, helping users find the best deals and discounts in Finland.

IMPORTANT - BE STRICT ABOUT THESE RULES:
1. Greet users friendly in English
2. If user just greets (like "hi", "hello"), ask what kind of discounts or offers they're looking for
3. SEARCH OFFERS IN USER'S CITY OR NATIONWIDE OFFERS:
   - Show offers from user's city
   - Show offers marked as "koko maa" (nationwide)
   - Show offers that include user's city in multi-city listings
4. When users ask about offers, use the search_offers tool LIKE THIS:
   - For general terms like "clothes", "food", "technology" - use ONLY keywords, DON'T use category
   - Only use category field for very specific categories
   - ALWAYS use the user's city as filter
5. WHEN YOU FIND OFFERS:
   - Write a short, friendly message telling the user you found offers
   - Offer cards will appear automatically below your message
   - Encourage users to click on the offer cards for more details
6. If no offers found in user's city or nationwide:
   - Say: "I couldn't find [search term] offers today in [user's city] or nationwide offers"
   - Suggest alternative search terms in the same city

Always respond in English and be helpful in finding the best deals."#;

/// 系统提示词，附带用户所在城市
pub fn system_prompt(language: Language, user_city: Option<&str>) -> String {
    let mut prompt = match language {
        Language::Fi => SYSTEM_PROMPT_FI,
        Language::En => SYSTEM_PROMPT_EN,
    }
    .to_string();

    if let Some(city) = user_city.map(str::trim).filter(|c| !c.is_empty()) {
        match language {
            Language::Fi => prompt.push_str(&format!("\n\nKäyttäjän kaupunki: {}", city)),
            Language::En => prompt.push_str(&format!("\n\nUser's city: {}", city)),
        }
    }
    prompt
}

/// 找到结果后的第二轮指令
pub fn found_follow_up(language: Language, count: usize) -> String {
    match language {
        Language::Fi => format!(
            "Löysin {} tarjousta. Kirjoita lyhyt, ystävällinen viesti jossa kerrot löytäneesi \
             tarjouksia ja kannustat käyttäjää katsomaan niitä. Pidä viesti lyhyenä ja positiivisena.",
            count
        ),
        Language::En => format!(
            "I found {} offers. Write a short, friendly message telling the user you found offers \
             and encourage them to check them out. Keep the message brief and positive.",
            count
        ),
    }
}

/// 没有结果时的第二轮指令
pub fn not_found_follow_up(language: Language, keywords: Option<&str>, city: Option<&str>) -> String {
    match language {
        Language::Fi => format!(
            "En löytänyt {} tarjouksia tänään {}:ssa tai koko maan tarjouksia. Ehdota \
             vaihtoehtoisia hakutermejä samassa kaupungissa tai koko maassa.",
            keywords.unwrap_or("tarjouksia"),
            city.unwrap_or("käyttäjän kaupungissa")
        ),
        Language::En => format!(
            "I couldn't find {} offers today in {} or nationwide offers. Suggest alternative \
             search terms in the same city or nationwide.",
            keywords.unwrap_or("offers"),
            city.unwrap_or("user city")
        ),
    }
}

/// 没有可用模型凭据时的回复
pub fn unavailable_message(language: Language) -> &'static str {
    match language {
        Language::Fi => "AI-palvelu ei ole juuri nyt käytettävissä. Yritä myöhemmin uudelleen.",
        Language::En => "AI service not available. Please try again later.",
    }
}

/// 上游调用失败时的兜底回复
pub fn failure_message(language: Language) -> &'static str {
    match language {
        Language::Fi => "Anteeksi, minulla on teknisiä ongelmia. Yritä myöhemmin uudelleen.",
        Language::En => "Sorry, I'm having trouble right now. Please try again later.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_code() {
        assert_eq!(Language::from_code("fi"), Language::Fi);
        assert_eq!(Language::from_code(" FI "), Language::Fi);
        assert_eq!(Language::from_code("en"), Language::En);
        assert_eq!(Language::from_code("sv"), Language::En);
    }

    #[test]
    fn test_system_prompt_city_context() {
        let fi = system_prompt(Language::Fi, Some("Tampere"));
        assert!(fi.ends_with("\n\nKäyttäjän kaupunki: Tampere"));
        let en = system_prompt(Language::En, Some("Oulu"));
        assert!(en.ends_with("\n\nUser's city: Oulu"));
        let none = system_prompt(Language::En, Some("  "));
        assert!(!none.contains("User's city"));
    }

    #[test]
    fn test_follow_ups() {
        assert!(found_follow_up(Language::En, 3).starts_with("I found 3 offers."));
        assert!(found_follow_up(Language::Fi, 2).starts_with("Löysin 2 tarjousta."));

        let en = not_found_follow_up(Language::En, Some("pizza"), Some("Turku"));
        assert!(en.starts_with("I couldn't find pizza offers today in Turku"));
        let fi = not_found_follow_up(Language::Fi, None, None);
        assert!(fi.starts_with("En löytänyt tarjouksia tarjouksia tänään käyttäjän kaupungissa:ssa"));
    }
}
