use crate::models::RouteConfig;

/// Route prefixes that are never gated. Independent of the Default Catalog and of
/// anything persisted; `/` only matches the root itself.
pub const ALWAYS_VISIBLE: &[&str] = &[
    "/",
    "/login",
    "/signup",
    "/auth",
    "/admin",
    "/dashboard",
    "/marketplace",
    "/not-found",
];

// (path, name, description, visible by default)
const PAGE_DEFAULTS: &[(&str, &str, &str, bool)] = &[
    ("/blog", "Blog", "Articles and release notes", true),
    ("/pricing", "Pricing", "Plans and credit packs", true),
    ("/about", "About", "Company information", true),
    ("/contact", "Contact", "Support and sales contact form", true),
    ("/gallery", "Gallery", "Community showcase of generated artwork", true),
    ("/generate", "Generate", "AI text and image generation studio", true),
    ("/sell", "Sell", "Seller onboarding and listing creation", true),
    ("/creators", "Creators", "Creator directory", false),
    ("/beta", "Beta", "Features under evaluation", false),
];

const CONTENT_DEFAULTS: &[(&str, &str, &str, bool)] = &[
    ("/home/hero", "Home hero", "Headline banner on the home page", true),
    ("/home/featured", "Featured listings", "Curated listings carousel", true),
    ("/home/testimonials", "Testimonials", "Customer quotes block", true),
    ("/home/newsletter", "Newsletter", "Newsletter signup strip", false),
    ("/pricing/faq", "Pricing FAQ", "Questions under the pricing table", true),
];

/// Catalog
///
/// An ordered, compiled-in list of gateable routes with their default visibility.
/// Path uniqueness is assumed, not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<RouteConfig>,
}

impl Catalog {
    pub fn new(entries: Vec<RouteConfig>) -> Self {
        Self { entries }
    }

    /// The page-visibility Default Catalog.
    pub fn pages() -> Self {
        Self::from_table(PAGE_DEFAULTS)
    }

    /// The page-content Default Catalog.
    pub fn content() -> Self {
        Self::from_table(CONTENT_DEFAULTS)
    }

    fn from_table(table: &[(&str, &str, &str, bool)]) -> Self {
        Self::new(
            table
                .iter()
                .map(|(path, name, description, visible)| {
                    RouteConfig::new(path, name, description, *visible)
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[RouteConfig] {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&RouteConfig> {
        self.entries.iter().find(|entry| entry.path == path)
    }
}

/// is_always_visible
///
/// True when `path` equals an allowlisted prefix or is a sub-path of one
/// (`/admin/users` matches `/admin`, `/administrator` does not).
pub fn is_always_visible(path: &str) -> bool {
    ALWAYS_VISIBLE.iter().any(|prefix| {
        if *prefix == "/" {
            return path == "/";
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    })
}
