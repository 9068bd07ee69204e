fn main() {
	globe_timelapse::ui_main();
}
