use super::*;

#[derive(Default)]
struct Recorder {
    slots: LayoutSlots,
    speakers: Vec<String>,
    logo: Option<PathBuf>,
    title: Option<String>,
}

impl Layout for Recorder {
    fn slots(&self) -> LayoutSlots {
        self.slots
    }

    fn canvas(&self) -> Canvas {
        Canvas {
            width: 4,
            height: 4,
        }
    }

    fn add_speaker(&mut self, name: &str, _image_path: &Path) -> ReelResult<()> {
        self.speakers.push(name.to_owned());
        Ok(())
    }

    fn set_logo(&mut self, path: &Path) -> ReelResult<()> {
        self.logo = Some(path.to_path_buf());
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> ReelResult<()> {
        self.title = Some(title.to_owned());
        Ok(())
    }

    fn create_frame(&mut self, _: Option<&SubtitleEntry>, _: u8) -> ReelResult<FrameRGBA> {
        Ok(FrameRGBA::solid(4, 4, [0, 0, 0, 255]))
    }
}

fn setup() -> LayoutSetup {
    LayoutSetup {
        speakers: vec![
            ("Host".to_owned(), PathBuf::from("host.png")),
            ("Guest".to_owned(), PathBuf::from("guest.png")),
        ],
        logo: Some(PathBuf::from("logo.png")),
        title: Some("Show".to_owned()),
    }
}

#[test]
fn only_declared_slots_are_set() {
    let mut layout = Recorder {
        slots: LayoutSlots {
            logo: false,
            title: true,
        },
        ..Default::default()
    };
    apply_setup(&mut layout, &setup()).unwrap();
    assert_eq!(layout.speakers, vec!["Host", "Guest"]);
    assert_eq!(layout.logo, None);
    assert_eq!(layout.title.as_deref(), Some("Show"));
}

#[test]
fn default_setters_reject_undeclared_slots() {
    struct Bare;
    impl Layout for Bare {
        fn slots(&self) -> LayoutSlots {
            LayoutSlots::default()
        }
        fn canvas(&self) -> Canvas {
            Canvas::default()
        }
        fn add_speaker(&mut self, _: &str, _: &Path) -> ReelResult<()> {
            Ok(())
        }
        fn create_frame(&mut self, _: Option<&SubtitleEntry>, _: u8) -> ReelResult<FrameRGBA> {
            Err(ReelError::layout("unused"))
        }
    }

    let mut bare = Bare;
    assert!(bare.set_logo(Path::new("logo.png")).is_err());
    // apply_setup never reaches those setters.
    apply_setup(&mut bare, &setup()).unwrap();
}

#[test]
fn configured_factory_applies_setup_to_each_instance() {
    struct Factory;
    impl LayoutFactory for Factory {
        fn build(&self) -> ReelResult<Box<dyn Layout>> {
            Ok(Box::new(Recorder {
                slots: LayoutSlots {
                    logo: true,
                    title: true,
                },
                ..Default::default()
            }))
        }
    }

    let s = setup();
    let factory = ConfiguredFactory::new(&Factory, &s);
    let mut a = factory.build().unwrap();
    let b = factory.build().unwrap();
    assert!(a.create_frame(None, 255).is_ok());
    assert_eq!(b.canvas().width, 4);
}
