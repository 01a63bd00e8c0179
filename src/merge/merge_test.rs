//! Table-driven merge scenarios over schema-compiled types.

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::fieldpath::Path;
    use crate::merge::{assign, build, merge_node, Context, Mode};
    use crate::schema::{Schema, TypeDescriptor};
    use crate::typed::Node;
    use crate::value::{from_yaml, Value};

    const SCHEMA: &str = r#"types:
- name: Server
  fields:
  - name: host
    type: {scalar: string}
    default: localhost
  - name: port
    type: {scalar: int}
    default: 80
  - name: tags
    type: {map: {scalar: string}}
    default: {}
  - name: paths
    type: {list: {scalar: string}}
    default: []
  - name: ratio
    type: {scalar: float, optional: true}
    default: null
- name: Service
  fields:
  - name: name
    type: {scalar: string}
  - name: server
    type: {namedType: Server}
    default: {}
  - name: backup
    type: {namedType: Server, optional: true}
    default: null
  - name: level
    type: {literal: [debug, info, 0]}
    default: info
"#;

    fn yaml(s: &str) -> Value {
        from_yaml(s).unwrap()
    }

    fn service(base: &str) -> Node {
        let schema = Schema::from_yaml(SCHEMA).unwrap();
        let ty = TypeDescriptor::Struct(schema.struct_type("Service").unwrap());
        build(&ty, &yaml(base), &Context::detached()).unwrap()
    }

    struct MergeCase {
        name: &'static str,
        base: &'static str,
        incoming: &'static str,
        /// Expected tree on success, or the expected error message.
        expected: Result<&'static str, &'static str>,
    }

    const DEFAULTS: &str = r#"
name: api
server: {host: localhost, port: 80, tags: {}, paths: [], ratio: null}
backup: null
level: info
"#;

    fn merge_cases() -> Vec<MergeCase> {
        vec![
            MergeCase {
                name: "defaults fill unmentioned fields",
                base: "name: api",
                incoming: "{}",
                expected: Ok(DEFAULTS),
            },
            MergeCase {
                name: "numeric strings coerce",
                base: "name: api",
                incoming: "server: {port: '8080', ratio: 1}",
                expected: Ok(r#"
name: api
server: {host: localhost, port: 8080, tags: {}, paths: [], ratio: 1.0}
backup: null
level: info
"#),
            },
            MergeCase {
                name: "maps merge key by key",
                base: "{name: api, server: {tags: {a: x}}}",
                incoming: "server: {tags: {b: y}}",
                expected: Ok(r#"
name: api
server: {host: localhost, port: 80, tags: {a: x, b: y}, paths: [], ratio: null}
backup: null
level: info
"#),
            },
            MergeCase {
                name: "lists are replaced",
                base: "{name: api, server: {paths: [a, b]}}",
                incoming: "server: {paths: [c]}",
                expected: Ok(r#"
name: api
server: {host: localhost, port: 80, tags: {}, paths: [c], ratio: null}
backup: null
level: info
"#),
            },
            MergeCase {
                name: "optional struct is built from defaults",
                base: "name: api",
                incoming: "backup: {port: 81}",
                expected: Ok(r#"
name: api
server: {host: localhost, port: 80, tags: {}, paths: [], ratio: null}
backup: {host: localhost, port: 81, tags: {}, paths: [], ratio: null}
level: info
"#),
            },
            MergeCase {
                name: "missing marker keeps a present value",
                base: "name: api",
                incoming: "{name: '???', level: 0}",
                expected: Ok(r#"
name: api
server: {host: localhost, port: 80, tags: {}, paths: [], ratio: null}
backup: null
level: 0
"#),
            },
            MergeCase {
                name: "null into a required field",
                base: "name: api",
                incoming: "server: {port: null}",
                expected: Err("server.port: field of type int is not optional, cannot assign None"),
            },
            MergeCase {
                name: "unknown struct key",
                base: "name: api",
                incoming: "server: {tls: true}",
                expected: Err("server: key 'tls' not in 'Server'"),
            },
            MergeCase {
                name: "booleans are not numbers",
                base: "name: api",
                incoming: "server: {port: true}",
                expected: Err("server.port: value true of type bool is not a valid int"),
            },
            MergeCase {
                name: "floats do not truncate",
                base: "name: api",
                incoming: "server: {port: 1.5}",
                expected: Err("server.port: value 1.5 of type float is not a valid int"),
            },
            MergeCase {
                name: "literal members compare by type",
                base: "name: api",
                incoming: "level: false",
                expected: Err("level: false is not one of Literal['debug', 'info', 0]"),
            },
        ]
    }

    #[test]
    fn test_merge_cases() {
        for case in merge_cases() {
            let mut node = service(case.base);
            let result = merge_node(&mut node, &yaml(case.incoming), &Context::new(Mode::Merge));
            match case.expected {
                Ok(expected) => {
                    if let Err(err) = result {
                        panic!("{}: unexpected error {err}", case.name);
                    }
                    assert_eq!(node.to_raw(false), yaml(expected), "{}", case.name);
                }
                Err(message) => match result {
                    Ok(()) => panic!("{}: expected error {message}", case.name),
                    Err(err) => assert_eq!(err.to_string(), message, "{}", case.name),
                },
            }
        }
    }

    #[test]
    fn test_assign_replaces_where_merge_combines() {
        let mut merged = service("{name: api, server: {tags: {a: x}, port: 1}}");
        let mut assigned = merged.clone();
        let incoming = yaml("tags: {b: y}");

        let path = Path::parse("server").unwrap();
        merge_node(
            merged.child_mut(&crate::fieldpath::PathElement::key("server")).unwrap(),
            &incoming,
            &Context::new(Mode::Merge).at(path.clone()),
        )
        .unwrap();
        assign(&mut assigned, &path, &incoming).unwrap();

        assert_eq!(merged.at(&path).unwrap().to_raw(false), yaml("{host: localhost, port: 1, tags: {a: x, b: y}, paths: [], ratio: null}"));
        assert_eq!(assigned.at(&path).unwrap().to_raw(false), yaml("{host: localhost, port: 80, tags: {b: y}, paths: [], ratio: null}"));
    }

    #[test]
    fn test_assign_missing_marker_clears_value() {
        let mut node = service("name: api");
        assign(&mut node, &Path::parse("server.host").unwrap(), &Value::from("???")).unwrap();
        assert!(node.at(&Path::parse("server.host").unwrap()).unwrap().is_missing());
        assert!(node.at(&Path::parse("name").unwrap()).unwrap().to_raw(false) == Value::from("api"));
    }

    #[test]
    fn test_expressions_are_stored_unresolved() {
        let mut node = service("name: api");
        merge_node(&mut node, &yaml("server: {host: '${name}.local', port: '${other}'}"), &Context::new(Mode::Merge)).unwrap();
        assert!(node.at(&Path::parse("server.port").unwrap()).unwrap().is_interpolation());
        assert_eq!(
            node.at(&Path::parse("server.host").unwrap()).unwrap().to_raw(false),
            Value::from("${name}.local")
        );

        let err = merge_node(&mut node, &yaml("name: '${unclosed'"), &Context::new(Mode::Merge)).unwrap_err();
        assert!(err.is_interpolation(), "{err}");
    }
}
