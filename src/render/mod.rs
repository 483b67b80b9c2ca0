pub mod centered;
pub mod document;
pub mod issue_card;
pub mod metrics;
pub mod page;
pub mod pullbox;
pub mod schema;
pub mod text;
pub mod theme;

use std::collections::BTreeMap;

use crate::errors::RenderError;
use page::{AssetCache, Page};
use schema::{FieldDescriptor, Values};
use theme::CardTheme;

/// Something that turns validated field values into one printable page.
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;
    fn title(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn fields(&self) -> Vec<FieldDescriptor>;
    fn render(&self, values: &Values, assets: &AssetCache) -> Result<Page, RenderError>;
}

type Factory = Box<dyn Fn() -> Box<dyn Renderer> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererInfo {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

/// Renderers available by name. Passed explicitly to whoever needs one.
#[derive(Default)]
pub struct RendererRegistry {
    factories: BTreeMap<String, Factory>,
}

impl RendererRegistry {
    pub fn with_defaults(theme: CardTheme) -> Self {
        let mut registry = Self::default();
        registry.register("issuecard", move || {
            Box::new(issue_card::IssueCardRenderer::new(theme.clone()))
        });
        registry.register("centered", || Box::new(centered::CenteredRenderer));
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Renderer> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<Box<dyn Renderer>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn list(&self) -> Vec<RendererInfo> {
        self.factories
            .values()
            .map(|factory| {
                let renderer = factory();
                RendererInfo {
                    name: renderer.name(),
                    title: renderer.title(),
                    description: renderer.description(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_registered() {
        let registry = RendererRegistry::with_defaults(CardTheme::default());
        let names: Vec<_> = registry.list().into_iter().map(|info| info.name).collect();
        assert_eq!(names, vec!["centered", "issuecard"]);
        assert_eq!(registry.get("issuecard").unwrap().fields().len(), 8);
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn custom_renderers_can_be_added() {
        struct Blank;
        impl Renderer for Blank {
            fn name(&self) -> &'static str {
                "blank"
            }
            fn title(&self) -> &'static str {
                "Blank"
            }
            fn description(&self) -> &'static str {
                "An empty page"
            }
            fn fields(&self) -> Vec<FieldDescriptor> {
                Vec::new()
            }
            fn render(&self, _: &Values, _: &AssetCache) -> Result<Page, RenderError> {
                Ok(Page::new(100.0, 100.0))
            }
        }

        let mut registry = RendererRegistry::default();
        registry.register("blank", || Box::new(Blank));
        let page = registry
            .get("blank")
            .unwrap()
            .render(&Values::default(), &AssetCache::default())
            .unwrap();
        assert!(page.ops().is_empty());
    }
}
