//! Interactive query page served on `GET /{cluster}/graphql` (spec.md §4.5
//! "Serving": "GET returns the playground/GraphiQL page").

/// Render the playground or GraphiQL HTML for `endpoint`, matching whichever
/// of `Gateway.HandlerCfg.{Playground,GraphiQL}` is set; GraphiQL takes
/// precedence when both are (spec.md §4.5 "configured flags").
pub fn render(endpoint: &str, graphiql: bool) -> String {
    if graphiql {
        async_graphql::http::GraphiQLSource::build().endpoint(endpoint).finish()
    } else {
        async_graphql::http::playground_source(async_graphql::http::GraphQLPlaygroundConfig::new(endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_endpoint_into_page() {
        let page = render("/my-cluster/graphql", false);
        assert!(page.contains("/my-cluster/graphql"));
    }
}
