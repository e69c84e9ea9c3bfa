use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;

/// Sanitizer for rendered discussion bodies and READMEs.
pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "abbr",
        "blockquote",
        "br",
        "code",
        "dd",
        "del",
        "details",
        "div",
        "dl",
        "dt",
        "em",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "i",
        "img",
        "input",
        "ins",
        "kbd",
        "li",
        "ol",
        "p",
        "picture",
        "pre",
        "s",
        "section",
        "source",
        "span",
        "strong",
        "sub",
        "summary",
        "sup",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "u",
        "ul",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "dir",
        "aria-hidden",
        "aria-label",
        "role",
        "data-footnote-ref",
        "data-footnotes",
        "data-footnote-backref",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes(
        "img",
        &["alt", "width", "height", "align", "loading", "decoding"],
    );
    builder.add_tag_attributes("source", &["srcset", "media", "type"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan", "scope"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("p", &["align"]);
    builder.add_tag_attributes("div", &["align"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_tag_attributes("details", &["open"]);

    builder.add_url_schemes(["http", "https", "mailto"].iter().copied());

    builder
}

#[cfg(test)]
mod tests {
    use super::build_sanitizer;

    #[test]
    fn strips_scripts_and_event_handlers() {
        let html = build_sanitizer()
            .clean("<p onclick=\"x()\">hi</p><script>alert(1)</script>")
            .to_string();

        assert_eq!(html, "<p>hi</p>");
    }

    #[test]
    fn keeps_highlight_classes() {
        let html = build_sanitizer()
            .clean("<pre class=\"syntax-highlight\"><code class=\"syntax-code\"><span class=\"syntax-source\">x</span></code></pre>")
            .to_string();

        assert!(html.contains("class=\"syntax-highlight\""));
        assert!(html.contains("class=\"syntax-source\""));
    }

    #[test]
    fn drops_javascript_urls() {
        let html = build_sanitizer()
            .clean("<a href=\"javascript:alert(1)\">x</a>")
            .to_string();

        assert!(!html.contains("javascript"));
    }
}
